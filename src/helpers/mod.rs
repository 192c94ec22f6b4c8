pub mod debounce;
pub mod notifier;
