pub mod pipeline_driver;
