pub mod article;
pub mod city;
pub mod community;
pub mod image;
pub mod opportunity;
pub mod opportunity_slot;
pub mod place;
pub mod user;

pub use article::Article;
pub use city::{City, State};
pub use community::Community;
pub use image::Image;
pub use opportunity::Opportunity;
pub use opportunity_slot::OpportunitySlot;
pub use place::Place;
pub use user::User;
