mod mock_collector;

pub use mock_collector::MockCollector;
