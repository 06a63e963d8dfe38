use crate::types::User;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;

/// Contacts known to the session plus lazily computed views.
///
/// Seeded from `webwxinit`, filled with the full roster on first demand and
/// patched by sync deltas. Every mutation drops the cached views.
#[derive(Debug, Default)]
pub struct ContactCache {
    members: Vec<User>,
    full: bool,
    friends: OnceCell<Arc<Vec<User>>>,
    groups: OnceCell<Arc<Vec<User>>>,
    mps: OnceCell<Arc<Vec<User>>>,
    /// `(group, member)` pairs a detail fetch already failed to resolve.
    unresolved: HashSet<(String, String)>,
}

impl ContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the full roster has been fetched.
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[User] {
        &self.members
    }

    pub fn member_by_user_name(&self, user_name: &str) -> Option<&User> {
        self.members.iter().find(|u| u.user_name == user_name)
    }

    pub fn friends(&self) -> Arc<Vec<User>> {
        self.friends
            .get_or_init(|| Arc::new(self.filtered(User::is_friend)))
            .clone()
    }

    pub fn groups(&self) -> Arc<Vec<User>> {
        self.groups
            .get_or_init(|| Arc::new(self.filtered(User::is_group)))
            .clone()
    }

    pub fn mps(&self) -> Arc<Vec<User>> {
        self.mps
            .get_or_init(|| Arc::new(self.filtered(User::is_mp)))
            .clone()
    }

    fn filtered(&self, pred: fn(&User) -> bool) -> Vec<User> {
        self.members.iter().filter(|u| pred(u)).cloned().collect()
    }

    fn invalidate(&mut self) {
        self.friends = OnceCell::new();
        self.groups = OnceCell::new();
        self.mps = OnceCell::new();
    }

    /// Replace everything; `full` marks a complete roster. Group member
    /// lists already cached survive when the new record has none.
    pub fn replace_all(&mut self, mut members: Vec<User>, full: bool) {
        for user in members.iter_mut().filter(|u| u.member_list.is_empty()) {
            if let Some(old) = self.member_by_user_name(&user.user_name) {
                user.member_list = old.member_list.clone();
            }
        }
        self.members = members;
        self.full = full;
        self.unresolved.clear();
        self.invalidate();
    }

    /// Insert or replace by `UserName`. A replacement without a member
    /// list keeps the cached one.
    pub fn upsert(&mut self, user: User) {
        match self
            .members
            .iter_mut()
            .find(|u| u.user_name == user.user_name)
        {
            Some(existing) => {
                let members = std::mem::take(&mut existing.member_list);
                *existing = user;
                if existing.member_list.is_empty() {
                    existing.member_list = members;
                }
            }
            None => self.members.push(user),
        }
        self.invalidate();
    }

    pub fn remove(&mut self, user_name: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|u| u.user_name != user_name);
        let removed = self.members.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Apply a `ModChatRoomMemberList` entry or fetched group details: merge
    /// members into the cached group, or append the group if it is new. A
    /// record carrying a nick name also replaces the group's own fields;
    /// member-only entries leave them alone.
    pub fn merge_group(&mut self, group: &User) {
        match self
            .members
            .iter_mut()
            .find(|u| u.user_name == group.user_name)
        {
            Some(existing) if group.nick_name.is_empty() => {
                existing.merge_members(&group.member_list)
            }
            Some(existing) => {
                let members = std::mem::take(&mut existing.member_list);
                *existing = User {
                    member_list: members,
                    ..group.clone()
                };
                existing.merge_members(&group.member_list);
            }
            None => self.members.push(group.clone()),
        }
        self.invalidate();
    }

    /// Remember that fetching `group` did not resolve `member`.
    pub fn mark_unresolved(&mut self, group: &str, member: &str) {
        self.unresolved.insert((group.to_string(), member.to_string()));
    }

    pub fn is_unresolved(&self, group: &str, member: &str) -> bool {
        self.unresolved
            .contains(&(group.to_string(), member.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, flag: i32) -> User {
        User {
            user_name: name.into(),
            verify_flag: flag,
            ..Default::default()
        }
    }

    fn cache() -> ContactCache {
        let mut cache = ContactCache::new();
        cache.replace_all(
            vec![user("@f1", 0), user("@f2", 0), user("@@g1", 0), user("@mp", 24)],
            true,
        );
        cache
    }

    #[test]
    fn views_are_classified_and_disjoint() {
        let cache = cache();
        assert_eq!(cache.friends().len(), 2);
        assert_eq!(cache.groups().len(), 1);
        assert_eq!(cache.mps().len(), 1);
        for u in cache.members() {
            let hits = [u.is_friend(), u.is_group(), u.is_mp()]
                .iter()
                .filter(|b| **b)
                .count();
            assert!(hits <= 1);
        }
    }

    #[test]
    fn views_refresh_after_mutation() {
        let mut cache = cache();
        let before = cache.friends();
        assert!(Arc::ptr_eq(&before, &cache.friends()));
        cache.upsert(user("@f3", 0));
        assert_eq!(cache.friends().len(), 3);
        assert!(cache.remove("@f1"));
        assert!(!cache.remove("@missing"));
        assert_eq!(cache.friends().len(), 2);
    }

    #[test]
    fn upsert_keeps_member_list() {
        let mut cache = cache();
        let mut group = user("@@g1", 0);
        group.member_list = vec![user("@m1", 0)];
        cache.merge_group(&group);
        let mut renamed = user("@@g1", 0);
        renamed.nick_name = "renamed".into();
        cache.upsert(renamed);
        let g = cache.member_by_user_name("@@g1").unwrap();
        assert_eq!(g.nick_name, "renamed");
        assert_eq!(g.member_list.len(), 1);
    }

    #[test]
    fn replace_all_keeps_known_member_lists() {
        let mut cache = cache();
        let mut group = user("@@g1", 0);
        group.member_list = vec![user("@m1", 0)];
        cache.merge_group(&group);
        cache.replace_all(vec![user("@@g1", 0), user("@f1", 0)], true);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.member_by_user_name("@@g1").unwrap().member_list.len(), 1);
    }

    #[test]
    fn merge_group_refreshes_group_fields() {
        let mut cache = cache();
        let mut group = user("@@g1", 0);
        group.nick_name = "old".into();
        group.member_list = vec![user("@m1", 0)];
        cache.merge_group(&group);

        let mut delta = user("@@g1", 0);
        delta.nick_name = "new".into();
        delta.remark_name = "ours".into();
        delta.member_list = vec![user("@m2", 0)];
        cache.merge_group(&delta);

        let g = cache.member_by_user_name("@@g1").unwrap();
        assert_eq!(g.nick_name, "new");
        assert_eq!(g.remark_name, "ours");
        assert_eq!(g.member_list.len(), 2);
        assert_eq!(g.member_count, 2);
        assert_eq!(cache.groups()[0].nick_name, "new");

        let mut members_only = user("@@g1", 0);
        members_only.member_list = vec![user("@m3", 0)];
        cache.merge_group(&members_only);
        let g = cache.member_by_user_name("@@g1").unwrap();
        assert_eq!(g.nick_name, "new");
        assert_eq!(g.member_list.len(), 3);
    }

    #[test]
    fn unresolved_senders_reset_with_roster() {
        let mut cache = cache();
        cache.mark_unresolved("@@g1", "@ghost");
        assert!(cache.is_unresolved("@@g1", "@ghost"));
        assert!(!cache.is_unresolved("@@g1", "@other"));
        cache.replace_all(vec![user("@@g1", 0)], true);
        assert!(!cache.is_unresolved("@@g1", "@ghost"));
    }

    #[test]
    fn merge_group_appends_unknown() {
        let mut cache = cache();
        let mut group = user("@@new", 0);
        group.member_list = vec![user("@m", 0)];
        cache.merge_group(&group);
        assert_eq!(cache.groups().len(), 2);
        assert!(cache
            .member_by_user_name("@@new")
            .unwrap()
            .member_by_user_name("@m")
            .is_some());
    }
}
