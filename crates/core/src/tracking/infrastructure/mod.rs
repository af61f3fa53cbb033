pub mod multi_box_tracker;
