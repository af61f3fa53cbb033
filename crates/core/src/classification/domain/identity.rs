/// A registered person. `id` is the classifier label, which is the
/// 0-based position of `name` in the identity list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: i32,
    pub name: String,
}

impl Identity {
    pub fn from_names(names: &[String]) -> Vec<Identity> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Identity {
                id: i as i32,
                name: name.clone(),
            })
            .collect()
    }
}
