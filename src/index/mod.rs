//! Record assignment and recommendation lookup over a trained map.

mod assignment;
pub mod recommend;

pub use assignment::{Assigner, Assignment};
pub use recommend::{Recommendation, RecommendationSearch};
