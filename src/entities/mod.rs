pub mod prelude;

pub mod cities;
pub mod users;
