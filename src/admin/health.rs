/*
 * Copyright 2022 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Process liveness, as reported on `/livez`.

use std::{
    panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Whether any thread of the process has panicked. A default value is live
/// and stays live until [`Health::install`] wires it to the panic hook.
#[derive(Clone, Default)]
pub struct Health {
    panicked: Arc<AtomicBool>,
}

impl Health {
    /// Chains a panic hook in front of the current one that marks the
    /// returned value as no longer live.
    pub fn install() -> Self {
        let health = Self::default();
        let panicked = health.panicked.clone();
        let previous = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            if !panicked.swap(true, Ordering::SeqCst) {
                tracing::error!(%info, "panic occurred, no longer live");
            }
            previous(info);
        }));

        health
    }

    pub fn is_live(&self) -> bool {
        !self.panicked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_marks_not_live() {
        let health = Health::install();
        let untouched = Health::default();
        assert!(health.is_live());

        let _ = panic::catch_unwind(|| panic!("worker died"));

        assert!(!health.is_live());
        assert!(untouched.is_live());
    }
}
