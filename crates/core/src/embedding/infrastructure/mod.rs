pub mod onnx_face_embedder;
