pub mod episodes;
pub mod seo;
pub mod sitemap;
