use hierarchy_core::MemoryBackend;

hierarchy_test_support::backend_conformance_suite!(Some(MemoryBackend::new()));
