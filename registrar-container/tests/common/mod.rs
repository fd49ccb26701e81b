//! Contracts and providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use registrar_container::prelude::*;

pub trait TestInterface1: Send + Sync {
    fn name(&self) -> &'static str;
}

pub trait TestInterface2: Send + Sync {}

pub trait TestInterfaceWithDependency: Send + Sync {
    fn dependency(&self) -> &Arc<dyn TestInterface1>;
}

pub struct TestClass1;

impl TestInterface1 for TestClass1 {
    fn name(&self) -> &'static str {
        "TestClass1"
    }
}

impl Injectable for TestClass1 {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|| TestClass1)
            .implements::<dyn TestInterface1>(|p| p)
    }
}

pub struct TestClass1Alternate;

impl TestInterface1 for TestClass1Alternate {
    fn name(&self) -> &'static str {
        "TestClass1Alternate"
    }
}

impl Injectable for TestClass1Alternate {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|| TestClass1Alternate)
            .implements::<dyn TestInterface1>(|p| p)
    }
}

/// Implements `TestInterface2` only.
pub struct TestClass2;

impl TestInterface2 for TestClass2 {}

impl Injectable for TestClass2 {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|| TestClass2)
            .implements::<dyn TestInterface2>(|p| p)
    }
}

pub struct TestClassWithDependency {
    pub dependency: Arc<dyn TestInterface1>,
}

impl TestInterfaceWithDependency for TestClassWithDependency {
    fn dependency(&self) -> &Arc<dyn TestInterface1> {
        &self.dependency
    }
}

impl Injectable for TestClassWithDependency {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|dependency: Arc<dyn TestInterface1>| TestClassWithDependency { dependency })
            .implements::<dyn TestInterfaceWithDependency>(|p| p)
    }
}

/// Two public constructors.
pub struct MultiCtorClass1 {
    pub label: &'static str,
}

impl TestInterface1 for MultiCtorClass1 {
    fn name(&self) -> &'static str {
        self.label
    }
}

impl Injectable for MultiCtorClass1 {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|| MultiCtorClass1 { label: "default" })
            .constructor(|_other: Arc<dyn TestInterface2>| MultiCtorClass1 { label: "from TestInterface2" })
            .implements::<dyn TestInterface1>(|p| p)
    }
}

/// Constructor takes a primitive.
pub struct InvalidCtorClass1 {
    pub value: i32,
}

impl TestInterface1 for InvalidCtorClass1 {
    fn name(&self) -> &'static str {
        "InvalidCtorClass1"
    }
}

impl Injectable for InvalidCtorClass1 {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|value: Arc<i32>| InvalidCtorClass1 { value: *value })
            .implements::<dyn TestInterface1>(|p| p)
    }
}

pub fn with_dependency_factory(_: &Resolver<'_>) -> Result<TestClassWithDependency> {
    Ok(TestClassWithDependency {
        dependency: Arc::new(TestClass1),
    })
}
