/// Card posting and system status broadcasts.
pub mod card_events;
/// Command surface logic: cooldowns, permissions, notices.
pub mod command_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Chat adapter WebSocket gateway handling.
pub mod gateway_service;
/// Health check service.
pub mod health_service;
/// Match scoreboards and the global leaderboard.
pub mod leaderboard_service;
/// Category question bank loading and validation.
pub mod question_bank;
/// One question: answer window, scoring, reveal.
pub mod round_service;
/// Per-channel session lifecycle.
pub mod session_service;
/// Server-Sent Events streaming of presentation cards.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
