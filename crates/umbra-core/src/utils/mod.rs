// Copyright 2025 eraflo
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

//! Small shared helpers.

pub mod bitflags;

/// Rounds `value` up to the next power of two, with `0` staying `0`.
///
/// Atlas sizes and subdivisions treat `0` as "disabled", which
/// `u32::next_power_of_two` would turn into `1`.
#[inline]
pub fn next_power_of_two(value: u32) -> u32 {
    if value == 0 {
        0
    } else {
        value.next_power_of_two()
    }
}

/// Returns `true` if `value` is zero or a power of two.
#[inline]
pub fn is_power_of_two_or_zero(value: u32) -> bool {
    value == 0 || value.is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stays_disabled() {
        assert_eq!(next_power_of_two(0), 0);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(3), 4);
        assert_eq!(next_power_of_two(4096), 4096);
        assert_eq!(next_power_of_two(4097), 8192);
    }

    #[test]
    fn power_of_two_check() {
        assert!(is_power_of_two_or_zero(0));
        assert!(is_power_of_two_or_zero(256));
        assert!(!is_power_of_two_or_zero(300));
    }
}
