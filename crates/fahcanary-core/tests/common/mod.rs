pub mod mock_daemon;
