pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDER_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDER_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Length of every face embedding in the system.
pub const EMBEDDING_SIZE: usize = 512;

/// Square side of the embedder's face input when the model does not
/// declare one.
pub const FACE_SIZE: u32 = 112;

/// Square side of the crop the detector runs on.
pub const CROP_SIZE: u32 = 300;

/// Training corpus: one `label idx:value ...` line per sample.
pub const DATA_FILE: &str = "data.txt";

/// Identity display names, one per line.
pub const LABEL_FILE: &str = "label.txt";

/// Title shown for a recognition whose label has no registered name.
pub const UNKNOWN_TITLE: &str = "Unknown";

pub const APP_DIR_NAME: &str = "DriverRecognition";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
