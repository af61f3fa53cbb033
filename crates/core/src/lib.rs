//! Face detection, recognition and multi-face tracking for camera streams.

pub mod capture {
    pub mod domain {
        pub mod captured_frame;
        pub mod image_reader;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod identity;
        pub mod labeled_sample;
        pub mod softmax_model;
        pub mod training_store;
    }
    pub mod face_classifier;
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod embedding {
    pub mod domain {
        pub mod embedding;
        pub mod face_embedder;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod enroll_identity_use_case;
    pub mod infrastructure;
    pub mod pipeline_logger;
    pub mod pipeline_state;
    pub mod recognition_context;
    pub mod recognize_faces_use_case;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod recognition;
    pub mod region;
    pub mod settings;
    pub mod transform;
}

pub mod tracking {
    pub mod domain {
        pub mod face_tracker;
        pub mod frame_geometry;
        pub mod region_smoother;
        pub mod tracked_object;
        pub mod tracker_config;
    }
    pub mod infrastructure;
}
