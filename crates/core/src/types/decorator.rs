/// `@name(arg, ...)` annotation on a type, field or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    pub name: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decorators(Vec<Decorator>);

impl Decorators {
    pub fn push(&mut self, decorator: Decorator) {
        self.0.push(decorator);
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Decorator> {
        self.0.iter().find(|d| d.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decorator> {
        self.0.iter()
    }
}
