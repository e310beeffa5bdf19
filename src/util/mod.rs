pub mod date;
pub mod description;
pub mod html;
pub mod slug;
pub mod title;
pub mod url_norm;
pub mod youtube;
