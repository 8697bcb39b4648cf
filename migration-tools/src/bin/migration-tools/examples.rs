use crate::commands::{migrate, tasks};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "list",
            groups: migrate::LIST_EXAMPLES,
        },
        CommandExample {
            name: "group",
            groups: migrate::GROUP_EXAMPLES,
        },
        CommandExample {
            name: "gate",
            groups: migrate::GATE_EXAMPLES,
        },
        CommandExample {
            name: "up",
            groups: migrate::UP_EXAMPLES,
        },
        CommandExample {
            name: "task",
            groups: tasks::EXAMPLES,
        },
    ]
}
