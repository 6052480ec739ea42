/*!
# Inventory DevKit - Stubs and helpers for kernel tests

Lets the kernel tests run a full catalog refresh without a Consul agent:
- `MockCatalog`: Consul catalog endpoints served over real HTTP (wiremock)
- `InstanceBuilder`: instance payloads shaped like `/v1/catalog/service/<name>`
- `TestHarness`: stub catalog + temporary snapshot directory + test logging
*/

pub mod catalog_stub;
pub mod fixtures;
pub mod test_utils;

pub use catalog_stub::MockCatalog;
pub use fixtures::InstanceBuilder;
pub use test_utils::TestHarness;
