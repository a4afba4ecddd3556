pub mod model;
pub mod paginator;
pub mod snowflake;
pub mod util;
