// Every variant states *where* things went wrong.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),   // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Pushing the frame to the window failed
    #[error("Camera init error: {0}")]
    CameraInit(String),   // Opening/starting the camera failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String),  // Grabbing/decoding a frame failed
    #[error("Model load error: {0}")]
    ModelLoad(String),    // A segmentation adapter could not get ready
    #[error("Segmentation error: {0}")]
    Segmentation(String), // A segmentation adapter failed on one frame
    #[error("Composite error: {0}")]
    Composite(String),    // Buffers handed to the compositor did not line up
}
