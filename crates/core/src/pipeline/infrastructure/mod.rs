pub mod threaded_orchestrator;
