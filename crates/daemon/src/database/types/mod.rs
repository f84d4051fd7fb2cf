mod dtext;
mod dtime;

pub use dtext::DText;
pub use dtime::DTime;
