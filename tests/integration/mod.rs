mod elevation_tests;
mod image_tests;
mod open_tests;
