pub mod text_file_store;
