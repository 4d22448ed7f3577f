mod recording;

pub use recording::RecordingNavigator;
