//! Example files rendered from complete specifications.

use integrations_dev::{DESCRIPTION_LINE_LENGTH_LIMIT, SpecLoader, render, write_examples};

/// Strip the common indentation and the leading newline of a test literal.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().skip_while(|line| line.trim().is_empty()).collect();
    let margin = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = String::new();
    for line in lines {
        out.push_str(line.get(margin..).unwrap_or("").trim_end());
        out.push('\n');
    }
    // Literals end with an indented closing line.
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

fn render_example(spec: &str) -> (String, Vec<String>) {
    let mut loader = SpecLoader::new(dedent(spec));
    let errors = loader.load().to_vec();
    assert!(errors.is_empty(), "{:#?}", errors);

    let mut files = render(&loader).unwrap();
    files.remove("test.yaml.example").unwrap()
}

#[test]
fn test_invalid_spec() {
    let mut loader = SpecLoader::new(dedent(
        "
        foo:
        - bar
        ",
    ));
    loader.load();

    let err = render(&loader).unwrap_err();
    assert_eq!(err.to_string(), "The configuration specification has 3 errors");
}

#[test]
fn test_option_no_section() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: ad_identifiers
            description: |
              some

              words
            value:
              type: array
              items:
                type: string
        ",
    );

    assert!(errors.is_empty());
    assert_eq!(
        contents,
        dedent(
            "
            ## ad_identifiers - list of strings - optional
            ## some
            ##
            ## words
            #
            # ad_identifiers: []
            "
        )
    );
}

#[test]
fn test_section_with_option() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: init_config
            options:
            - name: foo
              description: foo words
              value:
                type: string
            - name: bar
              description: bar words
              value:
                type: number
        ",
    );

    assert!(errors.is_empty());
    assert_eq!(
        contents,
        dedent(
            "
            ## All options defined here will be available to all instances.
            #
            init_config:

                ## foo - string - optional
                ## foo words
                #
                # foo: <FOO>

                ## bar - number - optional
                ## bar words
                #
                # bar: <BAR>
            "
        )
    );
}

#[test]
fn test_section_example() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: logs
            example:
            - type: file
              path: /var/log/apache2/access.log
              source: apache
              service: apache
        ",
    );

    assert!(errors.is_empty());
    assert!(contents.starts_with("## Log Section\n##\n## type - required"));
    assert!(contents.ends_with(&dedent(
        "
        #
        # logs:
        # - type: file
        #   path: /var/log/apache2/access.log
        #   source: apache
        #   service: apache
        "
    )));
}

#[test]
fn test_section_multiple_required() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: instances
            options:
            - name: bar
              description: bar words
              required: true
              value:
                type: string
        ",
    );

    assert!(errors.is_empty());
    assert_eq!(
        contents,
        dedent(
            "
            ## Every instance will be scheduled independent of the others.
            #
            instances:

                ## bar - string - required
                ## bar words
                #
              - bar: <BAR>
            "
        )
    );
}

#[test]
fn test_section_multiple_no_required() {
    let (contents, _) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: instances
            options:
            - name: foo
              description: foo words
              value:
                type: string
            - name: bar
              description: bar words
              required: true
              value:
                type: string
        ",
    );

    assert_eq!(
        contents,
        dedent(
            "
            ## Every instance will be scheduled independent of the others.
            #
            instances:

              -
                ## foo - string - optional
                ## foo words
                #
                # foo: <FOO>

                ## bar - string - required
                ## bar words
                #
                bar: <BAR>
            "
        )
    );
}

#[test]
fn test_option_types() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: mapping
            description: words
            value:
              type: object
              example:
                bar: it
          - name: lists
            description: words
            value:
              type: array
              example:
              - bar
              - it
              items:
                type: array
                items:
                  type: string
          - name: flag
            description: words
            value:
              type: boolean
              example: true
          - name: number
            description: words
            value:
              type: number
              example: 5
          - name: text
            description: words
            value:
              type: string
              example: something
        ",
    );

    assert!(errors.is_empty());
    assert_eq!(
        contents,
        dedent(
            "
            ## mapping - mapping - optional
            ## words
            #
            # mapping:
            #   bar: it

            ## lists - list of lists - optional
            ## words
            #
            # lists:
            # - bar
            # - it

            ## flag - boolean - optional - default: true
            ## words
            #
            # flag: true

            ## number - number - optional - default: 5
            ## words
            #
            # number: 5

            ## text - string - optional - default: something
            ## words
            #
            # text: something
            "
        )
    );
}

#[test]
fn test_description_length_limit() {
    let long = "a".repeat(DESCRIPTION_LINE_LENGTH_LIMIT);
    let spec = format!(
        "name: foo\nversion: 0.0.0\nfiles:\n- name: test.yaml\n  example_name: test.yaml.example\n  options:\n  - name: foo\n    description: {long}\n    options:\n    - name: bar\n      description: words\n      value:\n        type: string\n  - name: baz\n    description: {long}\n    value:\n      type: string\n"
    );
    let (_, errors) = render_example(&spec);

    assert!(errors.contains(
        &"Description line length of section `foo` was over the limit by 3 characters".to_string()
    ));
    assert!(errors.contains(
        &"Description line length of option `baz` was over the limit by 3 characters".to_string()
    ));
}

#[test]
fn test_template() {
    let (contents, errors) = render_example(
        "
        name: foo
        version: 0.0.0
        files:
        - name: test.yaml
          example_name: test.yaml.example
          options:
          - name: instances
            options:
            - name: foo
              description: words
              value:
                type: string
            - template: instances/global
        ",
    );

    assert!(errors.is_empty());
    assert_eq!(
        contents,
        dedent(
            "
            ## Every instance will be scheduled independent of the others.
            #
            instances:

              -
                ## foo - string - optional
                ## words
                #
                # foo: <FOO>

                ## min_collection_interval - number - optional - default: 15
                ## This changes the collection interval of the check. For more information, see:
                ## https://docs.datadoghq.com/developers/write_agent_check/#collection-interval
                #
                # min_collection_interval: 15
            "
        )
    );
}

#[test]
fn test_write_and_check() {
    let dir = tempfile::tempdir().unwrap();
    let mut loader = SpecLoader::new(dedent(
        "
        name: foo
        version: 0.0.0
        files:
        - name: foo.yaml
          options:
          - template: init_config
            options:
            - template: init_config/default
          - template: instances
            options:
            - name: host
              required: true
              description: Host to connect to.
              value:
                type: string
            - template: instances/default
        ",
    ));
    assert!(loader.load().is_empty(), "{:?}", loader.errors());
    let files = render(&loader).unwrap();

    // Nothing rendered yet.
    let problems = write_examples(&files, dir.path(), true).unwrap();
    assert_eq!(problems.len(), 1);
    assert!(problems[0].contains("conf.yaml.example"));

    assert!(write_examples(&files, dir.path(), false).unwrap().is_empty());
    let written = std::fs::read_to_string(dir.path().join("conf.yaml.example")).unwrap();
    assert!(written.contains("  - host: <HOST>\n"));
    assert!(written.contains("    # tags:\n    # - <KEY_1>:<VALUE_1>\n"));

    assert!(write_examples(&files, dir.path(), true).unwrap().is_empty());

    std::fs::write(dir.path().join("conf.yaml.example"), "stale").unwrap();
    assert_eq!(write_examples(&files, dir.path(), true).unwrap().len(), 1);
}
