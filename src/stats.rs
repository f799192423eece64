/**
 * BookReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::cmp::Ordering;

use fnv::FnvHashMap;

/// Consecutive integer ids for users and items, plus the number of interactions observed per
/// user and per item.
pub struct DataDictionary {
    user_dict: FnvHashMap<String,u32>,
    item_dict: FnvHashMap<String,u32>,
    user_interaction_counts: Vec<u32>,
    item_interaction_counts: Vec<u32>,
    num_interactions: u64,
}

impl DataDictionary {

    pub fn num_users(&self) -> usize {
        self.user_dict.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_dict.len()
    }

    pub fn num_interactions(&self) -> u64 {
        self.num_interactions
    }

    pub fn user_index(&self, name: &str) -> Option<u32> {
        self.user_dict.get(name).cloned()
    }

    pub fn item_index(&self, name: &str) -> Option<u32> {
        self.item_dict.get(name).cloned()
    }

    /// Number of interactions of a user, zero for unknown users.
    pub fn user_count(&self, name: &str) -> u32 {
        self.user_index(name)
            .map(|user_index| self.user_interaction_counts[user_index as usize])
            .unwrap_or(0)
    }

    /// Number of interactions with an item, zero for unknown items.
    pub fn item_count(&self, name: &str) -> u32 {
        self.item_index(name)
            .map(|item_index| self.item_interaction_counts[item_index as usize])
            .unwrap_or(0)
    }

    /// User names ordered by `cmp_identifiers`.
    pub fn sorted_users(&self) -> Vec<&str> {
        sorted_names(&self.user_dict)
    }
}

impl DataDictionary {

    pub fn from_interactions<'a, I>(interactions: I) -> Self
        where I: Iterator<Item=(&'a str, &'a str)> {

        let mut user_index: u32 = 0;
        let mut user_dict: FnvHashMap<String,u32> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut user_interaction_counts: Vec<u32> = Vec::with_capacity(100);

        let mut item_index: u32 = 0;
        let mut item_dict: FnvHashMap<String,u32> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());
        let mut item_interaction_counts: Vec<u32> = Vec::with_capacity(100);

        let mut num_interactions: u64 = 0;

        for (user, item) in interactions {

            if !user_dict.contains_key(user) {
                user_dict.insert(user.to_owned(), user_index);
                user_interaction_counts.push(0);
                user_index += 1;
            }

            if !item_dict.contains_key(item) {
                item_dict.insert(item.to_owned(), item_index);
                item_interaction_counts.push(0);
                item_index += 1;
            }

            user_interaction_counts[user_dict[user] as usize] += 1;
            item_interaction_counts[item_dict[item] as usize] += 1;

            num_interactions += 1;
        }

        DataDictionary {
            user_dict,
            item_dict,
            user_interaction_counts,
            item_interaction_counts,
            num_interactions,
        }
    }
}

/// Identifiers that are both numeric compare as numbers, everything else compares bytewise.
/// Numeric identifiers sort before non-numeric ones.
pub fn cmp_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn sorted_names(dict: &FnvHashMap<String,u32>) -> Vec<&str> {
    let mut names: Vec<&str> = dict.keys().map(String::as_str).collect();
    names.sort_by(|a, b| cmp_identifiers(a, b));
    names
}


#[cfg(test)]
mod tests {

    use super::DataDictionary;

    #[test]
    fn counts_interactions_per_user_and_item() {
        let interactions = vec![
            ("alice", "apple"),
            ("alice", "dog"),
            ("alice", "pony"),
            ("bob", "apple"),
            ("bob", "pony"),
            ("charles", "pony"),
        ];

        let data_dict = DataDictionary::from_interactions(interactions.into_iter());

        assert_eq!(data_dict.num_users(), 3);
        assert_eq!(data_dict.num_items(), 3);
        assert_eq!(data_dict.num_interactions(), 6);

        assert_eq!(data_dict.user_count("alice"), 3);
        assert_eq!(data_dict.item_count("pony"), 3);
        assert_eq!(data_dict.item_count("bike"), 0);

        assert_eq!(data_dict.user_index("alice"), Some(0));
        assert_eq!(data_dict.item_index("pony"), Some(2));
    }

    #[test]
    fn identifiers_sort_numerically_when_possible() {
        let interactions = vec![("100", "b"), ("27", "a"), ("9", "C"), ("x", "a")];

        let data_dict = DataDictionary::from_interactions(interactions.into_iter());

        assert_eq!(data_dict.sorted_users(), vec!["9", "27", "100", "x"]);
    }
}
