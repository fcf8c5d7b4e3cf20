pub mod api_football;
pub mod budget;
pub mod openfootball;
pub mod provider;
pub mod records;
pub mod stats;

pub use api_football::ApiFootballClient;
pub use budget::RequestBudget;
pub use openfootball::OpenFootballClient;
pub use provider::{LeagueFileSource, StatSource};
