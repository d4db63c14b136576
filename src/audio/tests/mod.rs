//! Engine tests against an in-process fake subsystem


mod playback_tests;
mod monitor_tests;
mod wav_tests;
