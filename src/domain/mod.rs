pub mod asteroid;
pub mod picture;
pub mod status;
pub mod window;

pub use asteroid::Asteroid;
pub use picture::PictureOfDay;
pub use status::CacheStatus;
pub use window::RefreshWindow;
