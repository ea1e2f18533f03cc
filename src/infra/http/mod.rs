mod middleware;
mod public;
mod review;

pub use public::{HttpState, build_router};
pub use review::ReviewAuth;
