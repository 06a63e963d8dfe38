use serde::{Deserialize, Serialize};

/// User name of the file transfer assistant.
pub const FILE_HELPER: &str = "filehelper";

/// Verify flags marking subscription (official) accounts.
const MP_VERIFY_FLAGS: [i32; 3] = [8, 24, 136];

/// Contact classification derived from `UserName` and `VerifyFlag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Friend,
    Group,
    /// Subscription (official) account.
    Mp,
}

/// A user, group or subscription account as the gateway describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct User {
    pub uin: i64,
    /// Session-scoped handle; `@@` for groups, `@` for individuals.
    pub user_name: String,
    pub nick_name: String,
    pub head_img_url: String,
    pub remark_name: String,
    #[serde(rename = "PYInitial")]
    pub py_initial: String,
    #[serde(rename = "PYQuanPin")]
    pub py_quan_pin: String,
    #[serde(rename = "RemarkPYInitial")]
    pub remark_py_initial: String,
    #[serde(rename = "RemarkPYQuanPin")]
    pub remark_py_quan_pin: String,
    pub sex: i32,
    pub signature: String,
    pub verify_flag: i32,
    pub contact_flag: i32,
    pub star_friend: i32,
    pub sns_flag: i32,
    pub member_count: i32,
    pub owner_uin: i64,
    pub is_owner: i32,
    pub attr_status: i64,
    pub province: String,
    pub city: String,
    pub alias: String,
    /// Group nickname of a member; only set on `member_list` entries.
    pub display_name: String,
    pub key_word: String,
    pub encry_chat_room_id: String,
    pub member_list: Vec<User>,
}

impl User {
    pub fn is_friend(&self) -> bool {
        self.user_name.starts_with('@') && !self.user_name.starts_with("@@") && self.verify_flag == 0
    }

    pub fn is_group(&self) -> bool {
        self.user_name.starts_with("@@") && self.verify_flag == 0
    }

    pub fn is_mp(&self) -> bool {
        MP_VERIFY_FLAGS.contains(&self.verify_flag)
    }

    pub fn is_file_helper(&self) -> bool {
        self.user_name == FILE_HELPER
    }

    pub fn kind(&self) -> Option<ContactKind> {
        if self.is_group() {
            Some(ContactKind::Group)
        } else if self.is_friend() {
            Some(ContactKind::Friend)
        } else if self.is_mp() {
            Some(ContactKind::Mp)
        } else {
            None
        }
    }

    /// Name as shown to others in a group: display name, else nick name.
    pub fn display_or_nick(&self) -> &str {
        if self.display_name.is_empty() {
            &self.nick_name
        } else {
            &self.display_name
        }
    }

    /// Name the logged-in user sees: remark, else nick name.
    pub fn remark_or_nick(&self) -> &str {
        if self.remark_name.is_empty() {
            &self.nick_name
        } else {
            &self.remark_name
        }
    }

    pub fn member_by_user_name(&self, user_name: &str) -> Option<&User> {
        self.member_list.iter().find(|m| m.user_name == user_name)
    }

    /// Replace members by `UserName`, appending unseen ones.
    pub fn merge_members(&mut self, members: &[User]) {
        for member in members {
            match self
                .member_list
                .iter_mut()
                .find(|m| m.user_name == member.user_name)
            {
                Some(existing) => *existing = member.clone(),
                None => self.member_list.push(member.clone()),
            }
        }
        if self.member_count < self.member_list.len() as i32 {
            self.member_count = self.member_list.len() as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, verify_flag: i32) -> User {
        User {
            user_name: name.into(),
            verify_flag,
            ..Default::default()
        }
    }

    #[test]
    fn classification() {
        assert_eq!(user("@abc", 0).kind(), Some(ContactKind::Friend));
        assert_eq!(user("@@abc", 0).kind(), Some(ContactKind::Group));
        assert_eq!(user("@abc", 8).kind(), Some(ContactKind::Mp));
        assert_eq!(user("@abc", 24).kind(), Some(ContactKind::Mp));
        assert_eq!(user("@abc", 136).kind(), Some(ContactKind::Mp));
        assert_eq!(user("@abc", 56).kind(), None);
        assert_eq!(user(FILE_HELPER, 0).kind(), None);
    }

    #[test]
    fn classification_is_disjoint() {
        for name in ["@a", "@@a", "a", FILE_HELPER] {
            for flag in [0, 8, 24, 136, 56] {
                let u = user(name, flag);
                let hits = [u.is_friend(), u.is_group(), u.is_mp()]
                    .iter()
                    .filter(|b| **b)
                    .count();
                assert!(hits <= 1, "{name}/{flag} in {hits} views");
            }
        }
    }

    #[test]
    fn display_name_falls_back_to_nick() {
        let mut u = user("@a", 0);
        u.nick_name = "Nick".into();
        assert_eq!(u.display_or_nick(), "Nick");
        u.display_name = "InGroup".into();
        assert_eq!(u.display_or_nick(), "InGroup");
    }

    #[test]
    fn merge_members_replaces_and_appends() {
        let mut group = user("@@g", 0);
        group.member_list = vec![User {
            user_name: "@m1".into(),
            nick_name: "old".into(),
            ..Default::default()
        }];
        group.merge_members(&[
            User {
                user_name: "@m1".into(),
                nick_name: "new".into(),
                ..Default::default()
            },
            user("@m2", 0),
        ]);
        assert_eq!(group.member_list.len(), 2);
        assert_eq!(group.member_list[0].nick_name, "new");
        assert_eq!(group.member_count, 2);
    }

    #[test]
    fn deserializes_wire_names() {
        let u: User = serde_json::from_str(
            r#"{"UserName":"@x","NickName":"N","PYQuanPin":"n","VerifyFlag":24,"MemberList":[]}"#,
        )
        .unwrap();
        assert_eq!(u.user_name, "@x");
        assert_eq!(u.py_quan_pin, "n");
        assert!(u.is_mp());
    }
}
