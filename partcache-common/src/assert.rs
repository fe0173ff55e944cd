// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Checks an internal invariant.
///
/// Expands to `debug_assert!` unless feature "strict_assertions" is enabled, in which case the check also runs in
/// release builds.
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {
        #[cfg(feature = "strict_assertions")]
        assert!($($arg)*);
        #[cfg(not(feature = "strict_assertions"))]
        debug_assert!($($arg)*);
    }
}

/// Equality flavor of [`strict_assert!`].
#[macro_export]
macro_rules! strict_assert_eq {
    ($($arg:tt)*) => {
        #[cfg(feature = "strict_assertions")]
        assert_eq!($($arg)*);
        #[cfg(not(feature = "strict_assertions"))]
        debug_assert_eq!($($arg)*);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_strict_assert_passes_on_holding_invariant() {
        let tracked = 2usize;
        let capacity = 2usize;
        strict_assert!(tracked <= capacity);
        strict_assert_eq!(tracked, capacity, "policy and store disagree on membership");
    }

    #[test]
    #[should_panic]
    #[cfg(any(debug_assertions, feature = "strict_assertions"))]
    fn test_strict_assert_panics_on_broken_invariant() {
        let tracked = 3usize;
        let capacity = 2usize;
        strict_assert!(tracked <= capacity, "tracked {} over capacity {}", tracked, capacity);
    }
}
