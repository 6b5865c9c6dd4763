//! The `public` account shown to visitors who are not logged in.

use tracing::info;

use crate::accounts::AccountService;
use crate::auth::{hash_password, Principal};
use crate::error::TaskerResult;
use crate::permissions::Permissions;
use crate::registry::ListRegistry;
use crate::tasks::TaskStore;
use crate::types::account::DEFAULT_LIST;
use crate::types::{Account, TaskDraft, TaskList, TaskStatus};

/// Handle of the read-only account anonymous visitors see
pub const PUBLIC_HANDLE: &str = "public";

/// Registration date of the public account
const PUBLIC_CREATED_AT: i64 = 1_625_876_325;

/// The tasks greeting new visitors, oldest first.
pub fn welcome_tasks() -> Vec<TaskDraft> {
    vec![
        TaskDraft::new(
            "Find this website",
            "Congratulations! You found this task manager. Open it to learn more.",
        )
        .with_description(
            "### About\n\
             Tasker is a small list app anyone can use. It keeps things minimal:\n\n\
             - Tasks are encrypted at rest\n\
             - Delete your account and data at any time\n\
             - No ads, no tracking\n\
             - Completely open source",
        )
        .with_status(TaskStatus::Done)
        .with_created_at(1_628_640_195),
        TaskDraft::new(
            "Create your user",
            "The description of this task has a link to the registration page.",
        )
        .with_description(
            "Here is the link: [registration page](/register). Welcome!\n\n\
             This is experimental software, use it at your own risk. Titles, \
             summaries and descriptions of your tasks are encrypted to protect \
             your privacy.",
        )
        .with_created_at(1_629_151_854),
        TaskDraft::new("Make your login", "This task has a link for the login page.")
            .with_description(
                "Glad you registered. Here is the [login page](/login).\n\n\
                 Forgot the password? Use [reset password](/reset).",
            )
            .with_status(TaskStatus::Blocked)
            .with_created_at(1_629_153_284),
        TaskDraft::new("Learn to use this", "This task has a tutorial.")
            .with_description(
                "## Creating tasks\n\
                 After logging in, use the + sign to create a task and fill in \
                 the fields. **Only the description is optional.**\n\n\
                 ## Updating tasks\n\
                 Open a task and follow the edit link below its date.",
            )
            .with_created_at(1_629_417_118),
    ]
}

/// Create the `public` account with one publicly readable list holding
/// `welcome`.
///
/// The list is writable only while seeding; afterwards it carries
/// ReadTask|PublicList and nobody, the public account included, can write it.
pub async fn seed_public_account(
    accounts: &AccountService,
    registry: &ListRegistry,
    tasks: &TaskStore,
    welcome: Vec<TaskDraft>,
) -> TaskerResult<Account> {
    let mut account = Account::new(PUBLIC_HANDLE, "", hash_password(""));
    account.permissions = Permissions::NONE;
    account.created_at = PUBLIC_CREATED_AT;
    account.lists.insert(
        DEFAULT_LIST.to_string(),
        TaskList {
            created_at: PUBLIC_CREATED_AT,
            ..TaskList::new(DEFAULT_LIST, PUBLIC_HANDLE, Permissions::LIST_DEFAULT)
        },
    );
    accounts.insert(&account)?;

    let public = Principal::new(PUBLIC_HANDLE, Permissions::NONE);
    let count = welcome.len();
    for draft in welcome {
        tasks
            .create(&public, PUBLIC_HANDLE, DEFAULT_LIST, draft)
            .await?;
    }
    registry.set_list_permissions(
        &public,
        DEFAULT_LIST,
        Permissions::READ_TASK | Permissions::PUBLIC_LIST,
    )?;

    info!(tasks = count, "Public account seeded");
    accounts.get_account(PUBLIC_HANDLE)
}
