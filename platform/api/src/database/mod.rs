mod camera;
mod camera_image;
mod category;
mod comment;
mod discussion;
mod follow;
mod like;
mod user;

pub use camera::*;
pub use camera_image::*;
pub use category::*;
pub use comment::*;
pub use discussion::*;
pub use follow::*;
pub use like::*;
pub use user::*;
