/// 缓存数据模型
pub mod rate_limit;

pub use rate_limit::WindowCounter;
