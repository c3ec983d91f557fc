mod cli_tests;
mod config_tests;
mod requirements_tests;
