pub mod kv;
pub mod overrides;
