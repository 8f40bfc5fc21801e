pub mod audio_control;
