use std::collections::HashSet;

use chrono::NaiveDate;
use indexmap::IndexMap;
use log::debug;

use crate::error::GraphError;
use crate::model::{Marriage, MarriageDetails, Person, PersonId, check_lifespan, compare_birth_dates};

/// Id-indexed store of every person. All parent/child and spouse links go
/// through the mutators here so both directions always agree.
///
/// Iteration order is insertion order; the serializer writes people in that
/// order.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    people: IndexMap<PersonId, Person>,
}

impl FamilyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.people.contains_key(id)
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.get(id)
    }

    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PersonId> {
        self.people.keys()
    }

    /// Inserts a person without any relationships. Links carried by the value
    /// itself are discarded; use the link mutators instead.
    pub fn add_person(&mut self, mut person: Person) -> Result<(), GraphError> {
        if self.people.contains_key(person.id.as_str()) {
            return Err(GraphError::DuplicateId(person.id.to_string()));
        }
        check_lifespan(&person.id, person.birth_date, person.death_date)?;
        person.parent1 = None;
        person.parent2 = None;
        person.descendants.clear();
        person.marriages.clear();
        self.people.insert(person.id.clone(), person);
        Ok(())
    }

    /// One more than the largest purely numeric id in use. When that would
    /// overflow, the smallest unused positive number instead.
    pub fn generate_id(&self) -> PersonId {
        let max = self
            .people
            .keys()
            .filter_map(|id| id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let next = match max.checked_add(1) {
            Some(next) => next,
            None => (1..)
                .find(|n: &u64| !self.people.contains_key(n.to_string().as_str()))
                .unwrap_or(0),
        };
        PersonId::new(next.to_string())
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), GraphError> {
        let person = self.person_mut(id)?;
        person.display_name = name.into();
        Ok(())
    }

    pub fn set_lifespan(
        &mut self,
        id: &str,
        birth: Option<NaiveDate>,
        death: Option<NaiveDate>,
    ) -> Result<(), GraphError> {
        let person = self.person_mut(id)?;
        check_lifespan(&person.id, birth, death)?;
        person.birth_date = birth;
        person.death_date = death;
        Ok(())
    }

    /// Links `child` under `parent`, filling the first free parent slot.
    ///
    /// Silently ignored (returns `false`) when either id is unknown, the
    /// child already has two other parents, or the link would make someone
    /// their own ancestor. Linking an existing pair again only repairs a
    /// missing descendant entry.
    pub fn add_child(&mut self, parent: &str, child: &str) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            debug!(parent, child; "add_child: unknown person, ignored");
            return false;
        }
        let already_linked = self.people[child].has_parent(parent);
        if !already_linked {
            if !self.can_parent(parent, child) {
                debug!(parent, child; "add_child: would create an ancestry cycle, ignored");
                return false;
            }
            if !self.assign_parent_slot(child, parent) {
                debug!(parent, child; "add_child: child already has two parents, ignored");
                return false;
            }
        }
        let descendants = &mut self.people[parent].descendants;
        if !descendants.iter().any(|d| d == child) {
            descendants.push(PersonId::from(child));
        }
        true
    }

    /// Puts `parent` into the first free slot of `child` without touching the
    /// parent's descendant list. Callers must complete the link with
    /// [`FamilyGraph::add_child`].
    pub(crate) fn assign_parent_slot(&mut self, child: &str, parent: &str) -> bool {
        if !self.contains(parent) || !self.can_parent(parent, child) {
            return false;
        }
        let Some(person) = self.people.get_mut(child) else {
            return false;
        };
        if person.has_parent(parent) {
            return true;
        }
        if person.parent1.is_none() {
            person.parent1 = Some(PersonId::from(parent));
        } else if person.parent2.is_none() {
            person.parent2 = Some(PersonId::from(parent));
        } else {
            return false;
        }
        true
    }

    /// Replaces both parents of `child`, unlinking the previous ones.
    pub fn set_parents(
        &mut self,
        child: &str,
        parent1: Option<&str>,
        parent2: Option<&str>,
    ) -> Result<(), GraphError> {
        if !self.contains(child) {
            return Err(GraphError::UnknownPerson(child.to_string()));
        }
        if let (Some(a), Some(b)) = (parent1, parent2)
            && a == b
        {
            return Err(GraphError::SameParents(child.to_string()));
        }
        for parent in [parent1, parent2].into_iter().flatten() {
            if !self.contains(parent) {
                return Err(GraphError::UnknownPerson(parent.to_string()));
            }
            if parent == child {
                return Err(GraphError::SelfParent(child.to_string()));
            }
            if self.is_ancestor(child, parent) {
                return Err(GraphError::ParentCycle {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
        }

        let old = self.parents(child);
        for parent in &old {
            if let Some(p) = self.people.get_mut(parent.as_str()) {
                p.descendants.retain(|d| d != child);
            }
        }
        let person = &mut self.people[child];
        person.parent1 = None;
        person.parent2 = None;
        for parent in [parent1, parent2].into_iter().flatten() {
            self.add_child(parent, child);
        }
        Ok(())
    }

    /// Records a marriage on both sides with identical details.
    pub fn add_marriage(&mut self, a: &str, b: &str, details: MarriageDetails) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) {
            debug!(a, b; "add_marriage: invalid spouses, ignored");
            return false;
        }
        self.people[a].marriages.push(Marriage {
            spouse: PersonId::from(b),
            details: details.clone(),
        });
        self.people[b].marriages.push(Marriage {
            spouse: PersonId::from(a),
            details,
        });
        true
    }

    /// Rewrites the first marriage between `a` and `b` on both sides.
    pub fn update_marriage(&mut self, a: &str, b: &str, details: MarriageDetails) -> bool {
        let mut updated = false;
        for (owner, spouse) in [(a, b), (b, a)] {
            if let Some(marriage) = self
                .people
                .get_mut(owner)
                .and_then(|p| p.marriages.iter_mut().find(|m| m.spouse == spouse))
            {
                marriage.details = details.clone();
                updated = true;
            }
        }
        updated
    }

    /// Removes every marriage record between `a` and `b`, on both sides.
    pub fn remove_marriage(&mut self, a: &str, b: &str) -> usize {
        let mut removed = 0;
        for (owner, spouse) in [(a, b), (b, a)] {
            if let Some(person) = self.people.get_mut(owner) {
                let before = person.marriages.len();
                person.marriages.retain(|m| m.spouse != spouse);
                removed += before - person.marriages.len();
            }
        }
        removed
    }

    /// Stable-sorts `id`'s marriage records by `rank`, one key per record.
    /// Ignored unless `rank` covers every record.
    pub(crate) fn rank_marriages(&mut self, id: &str, rank: &[usize]) {
        let Some(person) = self.people.get_mut(id) else {
            return;
        };
        if rank.len() != person.marriages.len() {
            return;
        }
        let mut ranked: Vec<(usize, Marriage)> =
            rank.iter().copied().zip(person.marriages.drain(..)).collect();
        ranked.sort_by_key(|(key, _)| *key);
        person.marriages = ranked.into_iter().map(|(_, marriage)| marriage).collect();
    }

    /// Deletes a person and every reference to them.
    pub fn remove_person(&mut self, id: &str) -> Option<Person> {
        let mut removed = self.people.shift_remove(id)?;
        for other in self.people.values_mut() {
            if other.parent1.as_ref().is_some_and(|p| p == id) {
                other.parent1 = None;
            }
            if other.parent2.as_ref().is_some_and(|p| p == id) {
                other.parent2 = None;
            }
            other.descendants.retain(|d| d != id);
            other.marriages.retain(|m| m.spouse != id);
        }
        removed.parent1 = None;
        removed.parent2 = None;
        removed.descendants.clear();
        removed.marriages.clear();
        debug!(id; "removed person");
        Some(removed)
    }

    /// Known parents, parent1 first.
    pub fn parents(&self, id: &str) -> Vec<PersonId> {
        self.person(id)
            .map(|p| p.parent1.iter().chain(p.parent2.iter()).cloned().collect())
            .unwrap_or_default()
    }

    /// Every recorded spouse, ended marriages included, in marriage order.
    pub fn partners(&self, id: &str) -> Vec<PersonId> {
        self.collect_spouses(id, |_| true)
    }

    /// Spouses of marriages that have no end date.
    pub fn current_partners(&self, id: &str) -> Vec<PersonId> {
        self.collect_spouses(id, Marriage::is_active)
    }

    fn collect_spouses(&self, id: &str, keep: impl Fn(&Marriage) -> bool) -> Vec<PersonId> {
        let Some(person) = self.person(id) else {
            return Vec::new();
        };
        let mut spouses: Vec<PersonId> = Vec::new();
        for marriage in person.marriages.iter().filter(|m| keep(*m)) {
            if !spouses.contains(&marriage.spouse) {
                spouses.push(marriage.spouse.clone());
            }
        }
        spouses
    }

    /// Children of any of `id`'s parents, excluding `id`.
    pub fn siblings(&self, id: &str) -> Vec<PersonId> {
        let mut seen: HashSet<&PersonId> = HashSet::new();
        let mut siblings = Vec::new();
        for parent in self.parents(id) {
            let Some(parent) = self.person(parent.as_str()) else {
                continue;
            };
            for child in &parent.descendants {
                if child != id && seen.insert(child) {
                    siblings.push(child.clone());
                }
            }
        }
        siblings
    }

    /// Children whose two parents are exactly `id` and `partner`.
    pub fn shared_descendants(&self, id: &str, partner: &str) -> Vec<PersonId> {
        let Some(person) = self.person(id) else {
            return Vec::new();
        };
        let mut shared: Vec<PersonId> = Vec::new();
        for child in &person.descendants {
            let Some(c) = self.person(child.as_str()) else {
                continue;
            };
            let exact = matches!(
                (c.parent1.as_ref(), c.parent2.as_ref()),
                (Some(p1), Some(p2)) if (p1 == id && p2 == partner) || (p1 == partner && p2 == id)
            );
            if exact && !shared.contains(child) {
                shared.push(child.clone());
            }
        }
        shared
    }

    pub fn marriage_with(&self, id: &str, partner: &str) -> Option<&Marriage> {
        self.person(id)?.marriages.iter().find(|m| m.spouse == partner)
    }

    /// True when `ancestor` is reachable from `id` by following parent links.
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        let mut stack = self.parents(id);
        let mut visited: HashSet<PersonId> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if visited.insert(current.clone()) {
                stack.extend(self.parents(current.as_str()));
            }
        }
        false
    }

    /// Stable sort by birth date, undated people last.
    pub fn sort_by_birth(&self, ids: &mut [PersonId]) {
        ids.sort_by(|a, b| {
            compare_birth_dates(
                self.person(a.as_str()).and_then(Person::birth_date),
                self.person(b.as_str()).and_then(Person::birth_date),
            )
        });
    }

    pub fn sorted_for_display(&self) -> Vec<PersonId> {
        let mut people: Vec<&Person> = self.people.values().collect();
        people.sort_by(|a, b| a.display_cmp(b));
        people.into_iter().map(|p| p.id.clone()).collect()
    }

    /// Number of distinct couples with at least one marriage record.
    pub fn couple_count(&self) -> usize {
        let mut couples: HashSet<(&str, &str)> = HashSet::new();
        for person in self.people.values() {
            for marriage in &person.marriages {
                couples.insert(couple_key(person.id.as_str(), marriage.spouse.as_str()));
            }
        }
        couples.len()
    }

    fn can_parent(&self, parent: &str, child: &str) -> bool {
        parent != child && !self.is_ancestor(child, parent)
    }

    fn person_mut(&mut self, id: &str) -> Result<&mut Person, GraphError> {
        self.people
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownPerson(id.to_string()))
    }
}

/// Order-independent key of a couple: smaller id first.
pub fn couple_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}
