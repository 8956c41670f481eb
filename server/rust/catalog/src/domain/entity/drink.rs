use serde_json::Value;

/// Drink はカタログ上の 1 件のドリンク。recipe は自由形式の JSON として保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: Value,
}

impl Drink {
    pub fn new(id: i64, title: String, recipe: Value) -> Self {
        Self { id, title, recipe }
    }

    /// タイトルとレシピの部分更新を適用する。`None` の項目は変更しない。
    pub fn apply(&mut self, title: Option<String>, recipe: Option<Value>) {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(recipe) = recipe {
            self.recipe = recipe;
        }
    }
}
