pub mod category;
pub mod features;
pub mod question;
pub mod response;
pub mod response_log;
pub mod scoreboard;
pub mod survey;
