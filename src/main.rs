use lwm2m_stress::error::AppResult;

fn main() -> AppResult<()> {
    lwm2m_stress::entry::run()
}
