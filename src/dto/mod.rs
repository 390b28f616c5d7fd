pub mod classify_dto;
pub mod session_dto;
