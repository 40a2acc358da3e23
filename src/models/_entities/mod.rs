pub mod events;
pub mod face_clusters;
pub mod faces;
pub mod guest_queries;
pub mod guest_results;
pub mod jobs;
pub mod photos;
pub mod users;
