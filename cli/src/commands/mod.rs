pub mod decide;
pub mod feedback;
pub mod health;
pub mod logs;
