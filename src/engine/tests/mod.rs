mod helpers;
mod observer_tests;
