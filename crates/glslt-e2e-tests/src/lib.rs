//! End-to-end tests for glslt. The tests live under `tests/`; shader
//! fixtures are read from the workspace `demos/` directory.
