//! Descriptors and registration for the decorators `opal-exec` and
//! `opal-resolve` implement, wired into a [`Registry`].

use opal_error::OpalError;
use opal_registry::Registry;
use opal_schema::{BlockRequirement, DescriptorBuilder, ParamType, TransportScope};
use std::sync::Arc;

fn retry_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("retry")
        .summary("Re-run the child block on failure, up to a bounded number of attempts")
        .block_requirement(BlockRequirement::Required)
        .deprecated_alias("times", "attempts")
        .param("attempts", ParamType::Integer)
        .range(Some(1.0), Some(10.0))
        .default(3)
        .commit()
        .param("delay", ParamType::Duration)
        .default("1s")
        .commit()
        .param("backoff", ParamType::Enum)
        .enum_values(["constant", "linear", "exponential"])
        .default("constant")
        .commit()
        .build()
}

fn timeout_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("timeout")
        .summary("Bound the child block's execution to a duration, canceling it on expiry")
        .block_requirement(BlockRequirement::Required)
        .param("duration", ParamType::Duration)
        .default("30s")
        .commit()
        .build()
}

fn parallel_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("parallel")
        .summary("Run the block's child steps concurrently, under a bounded worker pool")
        .block_requirement(BlockRequirement::Required)
        .deprecated_alias("maxConcurrency", "max_workers")
        .param("max_workers", ParamType::Integer)
        .range(Some(1.0), None)
        .default(4)
        .commit()
        .param("onFailure", ParamType::Enum)
        .enum_values(["fail_fast", "wait_all"])
        .default("fail_fast")
        .commit()
        .build()
}

fn local_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("local")
        .summary("Run the child block against the local machine")
        .block_requirement(BlockRequirement::Required)
        .transport_scope(TransportScope::Local)
        .build()
}

fn ssh_connect_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("ssh.connect")
        .summary("Open (or reuse) an SSH session and run the child block against it")
        .block_requirement(BlockRequirement::Required)
        .transport_scope(TransportScope::Ssh)
        .param("host", ParamType::String)
        .primary()
        .required()
        .commit()
        .param("port", ParamType::Integer)
        .range(Some(1.0), Some(65535.0))
        .default(22)
        .commit()
        .param("user", ParamType::String)
        .commit()
        .param("key_path", ParamType::AuthHandle)
        .commit()
        .param("known_hosts_path", ParamType::String)
        .commit()
        .param("strict_host_key", ParamType::Boolean)
        .default(true)
        .commit()
        .build()
}

fn env_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("env")
        .summary("Read an environment variable from the current session")
        .param("property", ParamType::String)
        .primary()
        .required()
        .commit()
        .build()
}

fn var_descriptor() -> Result<opal_schema::Descriptor, OpalError> {
    DescriptorBuilder::new("var")
        .summary("Read a variable from the plan's in-memory variable store")
        .param("name", ParamType::String)
        .primary()
        .required()
        .commit()
        .build()
}

/// Register every built-in decorator against `registry`.
///
/// Called once at process start against [`Registry::global`]; tests that
/// want isolation construct their own [`Registry::new`] and call this
/// directly instead.
pub fn register_builtins(registry: &Registry) -> Result<(), OpalError> {
    registry.register(retry_descriptor()?, Arc::new(opal_exec::Retry))?;
    registry.register(timeout_descriptor()?, Arc::new(opal_exec::Timeout))?;
    registry.register(parallel_descriptor()?, Arc::new(opal_exec::Parallel))?;
    registry.register(local_descriptor()?, Arc::new(opal_exec::LocalTransport::new()))?;
    registry.register(ssh_connect_descriptor()?, Arc::new(opal_exec::SshTransport::new()))?;
    registry.register(env_descriptor()?, Arc::new(opal_resolve::EnvProvider))?;
    registry.register(var_descriptor()?, Arc::new(opal_resolve::VarProvider))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_registry::Role;

    #[test]
    fn registers_all_seven_builtins_with_no_path_collisions() {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        let mut paths = registry.list();
        paths.sort();
        assert_eq!(paths, vec!["env", "local", "parallel", "retry", "ssh.connect", "timeout", "var"]);
    }

    #[test]
    fn registering_twice_against_the_same_registry_fails_on_the_second_call() {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        assert!(register_builtins(&registry).is_err());
    }

    #[test]
    fn retry_and_parallel_infer_as_wrapper_roles() {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        assert!(registry.roles_of("retry").unwrap().contains(&Role::Wrapper));
        assert!(registry.roles_of("parallel").unwrap().contains(&Role::Wrapper));
    }

    #[test]
    fn transports_infer_both_wrapper_and_boundary_roles() {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        let roles = registry.roles_of("ssh.connect").unwrap();
        assert!(roles.contains(&Role::Wrapper));
        assert!(roles.contains(&Role::Boundary));
    }

    #[test]
    fn env_and_var_infer_as_provider_roles() {
        let registry = Registry::new();
        register_builtins(&registry).unwrap();
        assert!(registry.roles_of("env").unwrap().contains(&Role::Provider));
        assert!(registry.roles_of("var").unwrap().contains(&Role::Provider));
    }

    #[test]
    fn retry_descriptor_resolves_its_deprecated_times_alias() {
        let descriptor = retry_descriptor().unwrap();
        assert_eq!(descriptor.schema.resolve("times").map(|p| p.name.clone()), Some("attempts".to_string()));
    }

    #[test]
    fn ssh_connect_declares_ssh_only_transport_scope() {
        let descriptor = ssh_connect_descriptor().unwrap();
        assert_eq!(descriptor.capabilities.transport_scope, TransportScope::Ssh);
    }
}
