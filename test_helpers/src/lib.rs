//! Test helpers shared across the workspace.
//!
//! Currently provides environment variable guards, used by the resolver
//! tests. Test code only; not for production use.

pub mod env {
    //! RAII guards for mutating process environment variables in tests.
    //!
    //! The process environment is global state; every mutation goes through
    //! one mutex, and the returned guard restores the prior value on drop,
    //! so stacked guards unwind in LIFO order.
    //!
    //! # Examples
    //!
    //! ```
    //! use test_helpers::env;
    //!
    //! let _g = env::set_var("KEY", "VALUE");
    //! assert_eq!(std::env::var("KEY").expect("read env var"), "VALUE");
    //! // dropping `_g` restores (or unsets) the prior value
    //! ```

    use std::env;
    use std::ffi::{OsStr, OsString};
    use std::sync::{LazyLock, Mutex};

    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    /// Restores an environment variable to its prior state on drop.
    #[must_use = "dropping the guard restores the previous value"]
    pub struct VarGuard {
        key: String,
        prior: Option<OsString>,
    }

    /// Sets `key` to `value` and returns a guard restoring the prior state.
    pub fn set_var<K, V>(key: K, value: V) -> VarGuard
    where
        K: Into<String>,
        V: AsRef<OsStr>,
    {
        let key = key.into();
        let prior = locked(|| {
            let prior = env::var_os(&key);
            unsafe { raw_set(&key, value.as_ref()) };
            prior
        });
        VarGuard { key, prior }
    }

    /// Removes `key` and returns a guard restoring the prior state.
    pub fn remove_var<K: Into<String>>(key: K) -> VarGuard {
        let key = key.into();
        let prior = locked(|| {
            let prior = env::var_os(&key);
            unsafe { raw_remove(&key) };
            prior
        });
        VarGuard { key, prior }
    }

    impl Drop for VarGuard {
        fn drop(&mut self) {
            match self.prior.take() {
                Some(value) => locked(|| unsafe { raw_set(&self.key, &value) }),
                None => locked(|| unsafe { raw_remove(&self.key) }),
            }
        }
    }

    fn locked<R>(f: impl FnOnce() -> R) -> R {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        f()
    }

    #[inline]
    unsafe fn raw_set(key: &str, value: &OsStr) {
        // SAFETY: every call site holds ENV_MUTEX; test-only usage.
        unsafe { env::set_var(key, value) };
    }

    #[inline]
    unsafe fn raw_remove(key: &str) {
        // SAFETY: every call site holds ENV_MUTEX; test-only usage.
        unsafe { env::remove_var(key) };
    }

}
