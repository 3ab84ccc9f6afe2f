// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree configuration.

/// How [`request_update`](crate::Tree::request_update) treats an immediate
/// request that carries no new bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImmediatePolicy {
    /// Bubble to the root and hand the request to the scheduler, which then
    /// flushes. This is the default.
    #[default]
    BubbleToRoot,
    /// Run only the node's `on_request_update` hooks.
    LocalOnly,
}

/// Behavior switches for a [`Tree`](crate::Tree).
///
/// ```rust
/// use understory_lifecycle::{ImmediatePolicy, TreeConfig};
///
/// let config = TreeConfig::builder()
///     .immediate_policy(ImmediatePolicy::LocalOnly)
///     .consumer_gated(true)
///     .build();
/// assert!(config.consumer_gated());
/// assert_eq!(TreeConfig::default().immediate_policy(), ImmediatePolicy::BubbleToRoot);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeConfig {
    immediate_policy: ImmediatePolicy,
    consumer_gated: bool,
}

impl TreeConfig {
    /// Starts a builder with default settings.
    #[must_use]
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Returns the immediate-request policy.
    #[must_use]
    pub fn immediate_policy(&self) -> ImmediatePolicy {
        self.immediate_policy
    }

    /// Returns `true` if nodes that are not consuming only record required
    /// bits, without scheduling work, until they start consuming.
    #[must_use]
    pub fn consumer_gated(&self) -> bool {
        self.consumer_gated
    }
}

/// Builder for [`TreeConfig`].
#[derive(Clone, Debug)]
pub struct TreeConfigBuilder {
    config: TreeConfig,
}

impl TreeConfigBuilder {
    /// Sets the immediate-request policy.
    #[must_use]
    pub fn immediate_policy(mut self, policy: ImmediatePolicy) -> Self {
        self.config.immediate_policy = policy;
        self
    }

    /// Gates update scheduling on consumption.
    #[must_use]
    pub fn consumer_gated(mut self, gated: bool) -> Self {
        self.config.consumer_gated = gated;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TreeConfig {
        self.config
    }
}
